//! Notification copy.
//!
//! Templates carry two bodies: a plain one and one that addresses the user
//! by name. `{name}` and `{days}` are substituted at compose time. Milestone
//! messages are deterministic; struggle-time messages are drawn at random
//! from the slot's pool using an injected RNG.

use std::sync::Mutex;

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

use crate::milestones::Milestone;
use crate::struggle_time::StruggleTimeSlot;

/// A static message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    pub title: &'static str,
    pub body: &'static str,
    /// Used instead of `body` when the user has set a name.
    pub named_body: &'static str,
}

macro_rules! tpl {
    ($title:expr, $body:expr, $named:expr $(,)?) => {
        $crate::messages::MessageTemplate {
            title: $title,
            body: $body,
            named_body: $named,
        }
    };
}
pub(crate) use tpl;

/// Rendered title and body ready for the notification facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

/// Per-user substitutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Personalization {
    pub name: Option<String>,
    pub elapsed_days: u32,
}

impl Personalization {
    pub fn new(name: Option<String>, elapsed_days: u32) -> Self {
        Self { name, elapsed_days }
    }

    /// The trimmed name, if there is one worth using.
    fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

impl MessageTemplate {
    pub fn render(&self, personalization: &Personalization) -> NotificationContent {
        let days = personalization.elapsed_days.to_string();
        let body = match personalization.display_name() {
            Some(name) => self.named_body.replace("{name}", name),
            None => self.body.to_string(),
        };
        NotificationContent {
            title: self.title.replace("{days}", &days),
            body: body.replace("{days}", &days),
        }
    }
}

/// Picks and renders templates.
pub struct MessageComposer {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl MessageComposer {
    /// Composer seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(Box::new(Mcg128Xsl64::from_entropy()))
    }

    /// Reproducible composer for tests and previews.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(Box::new(Mcg128Xsl64::seed_from_u64(seed)))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Milestone copy. Always the milestone's first template, with the
    /// day count taken from the milestone itself.
    pub fn compose_milestone(
        &self,
        milestone: &Milestone,
        personalization: &Personalization,
    ) -> NotificationContent {
        let personalization = Personalization {
            name: personalization.name.clone(),
            elapsed_days: milestone.whole_days(),
        };
        match milestone.message_templates.first() {
            Some(template) => template.render(&personalization),
            None => NotificationContent {
                title: format!("🎉 {} sober", milestone.label),
                body: format!("You reached {}. Keep going.", milestone.label),
            },
        }
    }

    /// Struggle-time copy, one template drawn at random.
    pub fn compose_struggle_time(
        &self,
        slot: &StruggleTimeSlot,
        personalization: &Personalization,
    ) -> NotificationContent {
        let templates = slot.message_templates;
        if templates.is_empty() {
            return NotificationContent {
                title: format!("{} check-in", slot.display_name),
                body: "How are you doing right now?".to_string(),
            };
        }
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..templates.len())
        };
        templates[index].render(personalization)
    }
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self::new()
    }
}
