mod economy;
mod service;

pub use economy::{Collaborators, Economy, EconomySnapshot};
pub use service::{EconomyHandle, EconomyService};
