pub mod controller;
pub mod decision;
pub mod events;
pub mod poller;
pub mod reducer;

#[cfg(test)]
pub(crate) mod testing;
