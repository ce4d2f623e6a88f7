pub mod discovery;
pub mod repl;
pub mod run;
pub mod specials;
pub mod turn;

pub use run::run;
