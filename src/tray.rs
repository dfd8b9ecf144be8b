//! Menu model, action dispatch and the reload cycle behind the status item.

pub mod builder;
pub mod commands;
pub mod menu;
pub mod model;
pub mod refresh;

#[cfg(test)]
mod fakes;

pub mod platform {
    #[cfg(target_os = "macos")]
    pub mod macos;
}
