use rand::distributions::{Alphanumeric, DistString};
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A type with the ability to generate cookies.
///
/// Generators are shared between concurrent requests, hence generation takes `&self`.
pub trait SessionCookieGenerator<const COOKIE_LENGTH: usize>: Send + Sync {
    /// Generate a cookie, i.e. a string that is a valid HTTP cookie value.
    fn generate_cookie(&self) -> String;
}

/// The default cookie generator with focus on security.
/// It uses [rand::thread_rng] as a random source and the [Alphanumeric] distribution to generate cookie strings.
/// This gives `log_2(26+26+10) ≥ 5.95` bits of entropy per character.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionCookieGenerator<const COOKIE_LENGTH: usize = 64>;

impl<const COOKIE_LENGTH: usize> SessionCookieGenerator<COOKIE_LENGTH>
    for DefaultSessionCookieGenerator<COOKIE_LENGTH>
{
    fn generate_cookie(&self) -> String {
        Alphanumeric.sample_string(&mut rand::thread_rng(), COOKIE_LENGTH)
    }
}

/// A debug cookie generator that generates an ascending sequence of integers, formatted as strings padded with zeroes.
///
/// **Only use this in tests.** Its cookies are trivially guessable.
#[derive(Debug, Default)]
pub struct DebugSessionCookieGenerator<const COOKIE_LENGTH: usize = 64> {
    next_index: AtomicUsize,
}

impl<const COOKIE_LENGTH: usize> DebugSessionCookieGenerator<COOKIE_LENGTH> {
    /// Create a generator whose first cookie encodes `next_index`.
    pub fn starting_at(next_index: usize) -> Self {
        Self {
            next_index: AtomicUsize::new(next_index),
        }
    }
}

impl<const COOKIE_LENGTH: usize> SessionCookieGenerator<COOKIE_LENGTH>
    for DebugSessionCookieGenerator<COOKIE_LENGTH>
{
    fn generate_cookie(&self) -> String {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let mut cookie = String::with_capacity(COOKIE_LENGTH);
        // Writing to a string cannot fail.
        let _ = write!(&mut cookie, "{:0width$}", index, width = COOKIE_LENGTH);
        debug_assert_eq!(cookie.len(), COOKIE_LENGTH);
        cookie
    }
}
