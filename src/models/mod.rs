pub mod enums;
pub mod filters;
pub mod funnel;
pub mod note;
pub mod patient;
pub mod procedure;
pub mod reference;
pub mod user;

pub use filters::*;
pub use funnel::*;
pub use note::*;
pub use patient::*;
pub use procedure::*;
pub use reference::*;
pub use user::*;
