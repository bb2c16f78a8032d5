//! Built-in commands.

mod file;
mod text;

use crate::shell::registry::CommandRegistry;

/// Registers every built-in command, in help-listing order.
pub fn register_builtins(registry: &mut CommandRegistry) {
    file::register(registry);
    text::register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_are_registered() {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        for name in [
            "ls", "write", "append", "read", "echo", "dec64", "hd", "binprint", "size",
        ] {
            assert!(registry.get(name).is_some(), "missing builtin {name}");
        }
        assert!(registry.get("cat").is_none());
    }
}
