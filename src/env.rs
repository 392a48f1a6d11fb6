use std::cell::RefCell;

use crate::lexer::parse_int;

/// Cycle budget used when none is given on the command line.
pub const DEFAULT_MAX_CYCLES: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Env {
    max_cycles: usize,
    origin: u16,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read `OCTET_MAX_CYCLES` and `OCTET_ORIGIN` from the process environment.
pub fn init() {
    set_env(Env::read(|name| std::env::var(name).ok()));
}

impl Env {
    fn read(var: impl Fn(&str) -> Option<String>) -> Self {
        Env {
            max_cycles: var_int(&var, "OCTET_MAX_CYCLES")
                .and_then(|val| usize::try_from(val).ok())
                .unwrap_or(DEFAULT_MAX_CYCLES),
            origin: var_int(&var, "OCTET_ORIGIN")
                .and_then(|val| u16::try_from(val).ok())
                .unwrap_or(0),
        }
    }
}

/// Default limit on instructions executed by a single run.
pub fn max_cycles() -> usize {
    with_env(|env| env.max_cycles)
}

/// Default address to load binaries at and start executing from.
pub fn origin() -> u16 {
    with_env(|env| env.origin)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

/// Integer value of an environment variable. Unset or malformed values are ignored.
fn var_int(var: impl Fn(&str) -> Option<String>, name: &str) -> Option<i64> {
    let raw = var(name)?;
    let val = parse_int(raw.trim());
    if val.is_none() {
        log::warn!("ignoring malformed value `{raw}` for {name}");
    }
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(vars: &[(&str, &str)]) -> Env {
        Env::read(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, val)| val.to_string())
        })
    }

    #[test]
    fn defaults_without_variables() {
        assert_eq!(
            read(&[]),
            Env {
                max_cycles: DEFAULT_MAX_CYCLES,
                origin: 0
            }
        );
    }

    #[test]
    fn reads_literals() {
        let env = read(&[("OCTET_MAX_CYCLES", "250"), ("OCTET_ORIGIN", "0x100")]);
        assert_eq!(env.max_cycles, 250);
        assert_eq!(env.origin, 0x100);
    }

    #[test]
    fn ignores_bad_values() {
        let env = read(&[("OCTET_MAX_CYCLES", "lots"), ("OCTET_ORIGIN", "0x10000")]);
        assert_eq!(env.max_cycles, DEFAULT_MAX_CYCLES);
        assert_eq!(env.origin, 0);
    }
}
