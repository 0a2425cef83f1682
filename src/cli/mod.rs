//! CLI argument parsing and command handling.

mod args;
mod validators;

pub use args::{
    Cli, Command, ConfigAction, GlobalArgs, InterrogateArgs, ModelsAction, UpscaleArgs,
};
