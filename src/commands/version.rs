//! Command: print version information.

/// Print the pkgrules version to stdout.
pub fn run() {
    println!("pkgrules {}", crate::VERSION);
}
