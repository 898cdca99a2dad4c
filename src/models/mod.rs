pub mod period;
pub mod view;

pub use period::Period;
pub use view::{NewView, View, Viewable, ViewableRef};
