pub mod engine;
pub mod prompt;
pub mod screens;
pub mod states;

pub use engine::{DialogueDeps, DialogueEngine, DialogueSettings, Inbound, Outcome, SessionChange};
pub use prompt::{Ack, Button, Menu, Prompt, PromptBuilder, Reply};
pub use screens::Venue;
pub use states::{Choice, ClientDraft, DialogueEvent, IdleCommand, Step, StepKind};
