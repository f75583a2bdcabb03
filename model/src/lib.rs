mod flow;
mod node;
mod session;
mod todo;

pub use flow::*;
pub use node::*;
pub use session::*;
pub use todo::*;
