//! Onboarding step controller and story text personalisation.
//!
//! The browser walks a child/parent through a short linear wizard before the
//! first story. The flow state lives in an explicit [`OnboardingContext`] that
//! is passed through [`OnboardingFlow`]; the profile store remains the source of
//! truth and the context only carries a projection of it.
//!
//! ```text
//! Welcome -> ChildDetails -> EmailEntry -> CodeEntry -> Story
//! ```
//!
//! Any failure (delivery error, storage error) sends the user back one step.

use serde::{Deserialize, Serialize};

use crate::{Email, ProfileRecord};

/// Profile field holding the child's name.
pub const CHILD_NAME_FIELD: &str = "childName";
/// Profile field holding the child's pronouns.
pub const PRONOUNS_FIELD: &str = "pronouns";

/// Steps of the onboarding wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Welcome,
    ChildDetails,
    EmailEntry,
    CodeEntry,
    Story,
}

impl OnboardingStep {
    /// The step a failure returns to.
    #[must_use]
    pub const fn previous(self) -> Self {
        match self {
            Self::Welcome | Self::ChildDetails => Self::Welcome,
            Self::EmailEntry => Self::ChildDetails,
            Self::CodeEntry => Self::EmailEntry,
            Self::Story => Self::CodeEntry,
        }
    }
}

/// Inputs that drive the wizard forward (or back).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEvent {
    /// Continue from a step that only collects profile fields.
    Next,
    /// The email form was submitted and a code was sent.
    EmailSubmitted(Email),
    /// The entered code was accepted.
    CodeAccepted,
    /// Something went wrong; go back one step.
    Failed,
}

impl OnboardingEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::EmailSubmitted(_) => "email_submitted",
            Self::CodeAccepted => "code_accepted",
            Self::Failed => "failed",
        }
    }
}

/// Errors returned when an event does not apply to the current step.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("event '{event}' is not valid at step {step:?}")]
    InvalidEvent {
        step: OnboardingStep,
        event: &'static str,
    },
    #[error("a child name is required before continuing")]
    MissingChildName,
}

/// Everything the wizard knows about the user so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingContext {
    pub profile: ProfileRecord,
    pub email: Option<Email>,
    pub email_verified: bool,
}

/// Linear onboarding controller.
#[derive(Debug, Clone, Default)]
pub struct OnboardingFlow {
    step: OnboardingStep,
    context: OnboardingContext,
}

impl OnboardingFlow {
    /// Start a flow from a (possibly empty) stored profile.
    #[must_use]
    pub fn new(profile: ProfileRecord) -> Self {
        let email_verified = profile.is_email_verified();
        Self {
            step: OnboardingStep::Welcome,
            context: OnboardingContext {
                profile,
                email: None,
                email_verified,
            },
        }
    }

    #[must_use]
    pub const fn step(&self) -> OnboardingStep {
        self.step
    }

    #[must_use]
    pub const fn context(&self) -> &OnboardingContext {
        &self.context
    }

    /// Mutable access to the profile projection, for form fields.
    pub const fn profile_mut(&mut self) -> &mut ProfileRecord {
        &mut self.context.profile
    }

    /// Apply an event. On error the flow is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the event is not valid for the current
    /// step, or if required profile fields are missing.
    pub fn apply(&mut self, event: OnboardingEvent) -> Result<OnboardingStep, TransitionError> {
        let next = match (self.step, event) {
            (step, OnboardingEvent::Failed) => step.previous(),
            (OnboardingStep::Welcome, OnboardingEvent::Next) => OnboardingStep::ChildDetails,
            (OnboardingStep::ChildDetails, OnboardingEvent::Next) => {
                let has_name = self
                    .context
                    .profile
                    .get_str(CHILD_NAME_FIELD)
                    .is_some_and(|name| !name.trim().is_empty());
                if !has_name {
                    return Err(TransitionError::MissingChildName);
                }
                if self.context.email_verified {
                    OnboardingStep::Story
                } else {
                    OnboardingStep::EmailEntry
                }
            }
            (OnboardingStep::EmailEntry, OnboardingEvent::EmailSubmitted(email)) => {
                self.context.email = Some(email);
                OnboardingStep::CodeEntry
            }
            (OnboardingStep::CodeEntry, OnboardingEvent::CodeAccepted) => {
                if let Some(email) = &self.context.email {
                    self.context.profile.mark_email_verified(email);
                }
                self.context.email_verified = true;
                OnboardingStep::Story
            }
            (step, event) => {
                return Err(TransitionError::InvalidEvent {
                    step,
                    event: event.name(),
                });
            }
        };
        self.step = next;
        Ok(next)
    }
}

/// Pronoun set used when personalising story text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pronouns {
    He,
    She,
    #[default]
    They,
}

impl Pronouns {
    /// Read pronouns from a profile; anything unrecognised falls back to `They`.
    ///
    /// Accepts `"he"`, `"she"`, `"they"` and slash forms like `"she/her"`.
    #[must_use]
    pub fn from_profile(profile: &ProfileRecord) -> Self {
        let Some(raw) = profile.get_str(PRONOUNS_FIELD) else {
            return Self::They;
        };
        let first = raw.split('/').next().unwrap_or("").trim().to_lowercase();
        match first.as_str() {
            "he" => Self::He,
            "she" => Self::She,
            _ => Self::They,
        }
    }

    const fn subject(self) -> &'static str {
        match self {
            Self::He => "he",
            Self::She => "she",
            Self::They => "they",
        }
    }

    const fn object(self) -> &'static str {
        match self {
            Self::He => "him",
            Self::She => "her",
            Self::They => "them",
        }
    }

    const fn possessive(self) -> &'static str {
        match self {
            Self::He => "his",
            Self::She => "her",
            Self::They => "their",
        }
    }
}

/// Fill `{name}`, `{they}`, `{them}`, `{their}` (and capitalised `{They}`,
/// `{Them}`, `{Their}`) in story text from a profile.
///
/// Unknown placeholders and unbalanced braces are copied through unchanged.
/// A profile without a child name reads as "friend".
#[must_use]
pub fn personalize(template: &str, profile: &ProfileRecord) -> String {
    let name = profile
        .get_str(CHILD_NAME_FIELD)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("friend");
    let pronouns = Pronouns::from_profile(profile);

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest.get(open..).and_then(|s| s.find('}')).map(|i| open + i) else {
            break;
        };
        // Innermost token: the last `{` before the closing brace
        let start = rest.get(..close).and_then(|s| s.rfind('{')).unwrap_or(open);
        let (before, from_start) = rest.split_at(start);
        let (token, after) = from_start.split_at(close + 1 - start);
        out.push_str(before);

        let key = token
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(token);

        match key {
            "name" => out.push_str(name),
            "they" => out.push_str(pronouns.subject()),
            "them" => out.push_str(pronouns.object()),
            "their" => out.push_str(pronouns.possessive()),
            "They" => out.push_str(&capitalize(pronouns.subject())),
            "Them" => out.push_str(&capitalize(pronouns.object())),
            "Their" => out.push_str(&capitalize(pronouns.possessive())),
            _ => out.push_str(token),
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn profile(value: serde_json::Value) -> ProfileRecord {
        ProfileRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_happy_path() {
        let mut flow = OnboardingFlow::new(ProfileRecord::new());
        assert_eq!(flow.step(), OnboardingStep::Welcome);

        flow.apply(OnboardingEvent::Next).unwrap();
        flow.profile_mut()
            .insert(CHILD_NAME_FIELD, json!("Maya"));
        assert_eq!(
            flow.apply(OnboardingEvent::Next).unwrap(),
            OnboardingStep::EmailEntry
        );

        let email = Email::parse("parent@example.com").unwrap();
        assert_eq!(
            flow.apply(OnboardingEvent::EmailSubmitted(email)).unwrap(),
            OnboardingStep::CodeEntry
        );
        assert_eq!(
            flow.apply(OnboardingEvent::CodeAccepted).unwrap(),
            OnboardingStep::Story
        );
        assert!(flow.context().email_verified);
        assert!(flow.context().profile.is_email_verified());
    }

    #[test]
    fn test_child_name_required() {
        let mut flow = OnboardingFlow::new(ProfileRecord::new());
        flow.apply(OnboardingEvent::Next).unwrap();
        assert_eq!(
            flow.apply(OnboardingEvent::Next),
            Err(TransitionError::MissingChildName)
        );
        assert_eq!(flow.step(), OnboardingStep::ChildDetails);
    }

    #[test]
    fn test_verified_profile_skips_email() {
        let mut flow = OnboardingFlow::new(profile(json!({
            "childName": "Leo",
            "emailVerified": true
        })));
        flow.apply(OnboardingEvent::Next).unwrap();
        assert_eq!(
            flow.apply(OnboardingEvent::Next).unwrap(),
            OnboardingStep::Story
        );
    }

    #[test]
    fn test_failure_returns_to_prior_step() {
        let mut flow = OnboardingFlow::new(profile(json!({"childName": "Leo"})));
        flow.apply(OnboardingEvent::Next).unwrap();
        flow.apply(OnboardingEvent::Next).unwrap();
        flow.apply(OnboardingEvent::EmailSubmitted(
            Email::parse("p@example.com").unwrap(),
        ))
        .unwrap();

        assert_eq!(
            flow.apply(OnboardingEvent::Failed).unwrap(),
            OnboardingStep::EmailEntry
        );
        assert_eq!(OnboardingStep::Welcome.previous(), OnboardingStep::Welcome);
    }

    #[test]
    fn test_invalid_event_leaves_state() {
        let mut flow = OnboardingFlow::new(ProfileRecord::new());
        let err = flow.apply(OnboardingEvent::CodeAccepted).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidEvent {
                step: OnboardingStep::Welcome,
                event: "code_accepted",
            }
        );
        assert_eq!(flow.step(), OnboardingStep::Welcome);
        assert!(!flow.context().email_verified);
    }

    #[test]
    fn test_pronouns_from_profile() {
        assert_eq!(
            Pronouns::from_profile(&profile(json!({"pronouns": "she/her"}))),
            Pronouns::She
        );
        assert_eq!(
            Pronouns::from_profile(&profile(json!({"pronouns": "He"}))),
            Pronouns::He
        );
        assert_eq!(
            Pronouns::from_profile(&profile(json!({"pronouns": "xe"}))),
            Pronouns::They
        );
        assert_eq!(Pronouns::from_profile(&ProfileRecord::new()), Pronouns::They);
    }

    #[test]
    fn test_personalize() {
        let p = profile(json!({"childName": "Maya", "pronouns": "she/her"}));
        assert_eq!(
            personalize("{name} packed {their} bag. {They} waved.", &p),
            "Maya packed her bag. She waved."
        );

        let p = profile(json!({"childName": "Sam"}));
        assert_eq!(
            personalize("The owl followed {them} home.", &p),
            "The owl followed them home."
        );
    }

    #[test]
    fn test_personalize_leaves_unknown_tokens() {
        let p = profile(json!({"childName": "Leo", "pronouns": "he"}));
        assert_eq!(
            personalize("{name} saw {dragon} and {unclosed", &p),
            "Leo saw {dragon} and {unclosed"
        );
    }

    #[test]
    fn test_personalize_without_name() {
        assert_eq!(
            personalize("Hello, {name}!", &ProfileRecord::new()),
            "Hello, friend!"
        );
    }

    #[test]
    fn test_personalize_keeps_literal_braces() {
        let p = profile(json!({"childName": "Maya"}));
        assert_eq!(personalize("{{name}", &p), "{Maya");
        assert_eq!(personalize("{a {name}", &p), "{a Maya");
        assert_eq!(personalize("{{name}}", &p), "{Maya}");
        assert_eq!(personalize("} {name} {", &p), "} Maya {");
    }
}
