pub mod attacks;
pub mod board;
pub mod game;
pub mod movegen;
pub mod special;
pub mod types;

pub use board::Board;
pub use game::Game;
pub use movegen::pseudo_legal_moves;
pub use types::*;
