pub mod board;
pub mod game;
pub mod notation;
pub mod perft;
pub mod rules;
pub mod types;

// Re-export the rule engine surface
pub use board::*;
pub use game::*;
pub use notation::san;
pub use perft::perft;
pub use rules::*;
pub use types::*;
