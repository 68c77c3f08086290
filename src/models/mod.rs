pub mod game;
pub mod question;

#[cfg(test)]
pub(crate) mod fixtures;
