//! Terminal output helpers.

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn section(&self, title: &str) {
        println!("\n{}", title.bold().underline());
    }

    pub fn status(&self, message: &str) {
        println!("{} {}", "•".bright_blue(), message);
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", "!".yellow(), message.yellow());
    }

    pub fn kv(&self, key: &str, value: &str) {
        println!("  {} {}", format!("{}:", key).dimmed(), value);
    }

    pub fn print(&self, text: &str) {
        println!("{}", text);
    }
}
