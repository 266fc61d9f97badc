use std::path::PathBuf;

/// Expands a config file path given on the command line, replacing a leading
/// `~` or `$HOME` with the user's home directory.
///
/// Relative paths stay relative to the current directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(expand_home(path))
}

fn expand_home(input: &str) -> String {
    let rest = if input == "~" || input.starts_with("~/") {
        &input[1..]
    } else if input == "$HOME" || input.starts_with("$HOME/") {
        &input[5..]
    } else {
        return input.into();
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.to_string_lossy()),
        None => input.into(),
    }
}
