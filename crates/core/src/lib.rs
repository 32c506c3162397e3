pub mod controller;
pub mod critique;
pub mod dialogue;
pub mod matcher;
pub mod persona;
pub mod service;
pub mod session;

pub use controller::{Phase, SessionController};
pub use critique::{Anchor, BoundingBox, CritiquePoint, CritiqueReply, SourceKind};
pub use dialogue::{Dialogue, DialogueState, Message, Role};
pub use persona::Persona;
pub use service::{CritiqueRequest, ProfessorService};
pub use session::{Session, SourceMaterial};
