//! Random initial passwords.
//!
//! Every character pick and the final shuffle draw from the operating
//! system CSPRNG.
use rand::Rng;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

pub const PASSWORD_LEN: usize = 12;

pub const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &[u8] = b"0123456789";
pub const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}?";

fn pick<R: Rng>(rng: &mut R, set: &[u8]) -> u8 {
    set[rng.gen_range(0..set.len())]
}

/// A [`PASSWORD_LEN`] password holding at least one lowercase letter, one
/// uppercase letter, one digit and one symbol.
pub fn generate_password() -> String {
    let mut rng = OsRng;
    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut bytes: Vec<u8> = classes.iter().map(|set| pick(&mut rng, set)).collect();
    while bytes.len() < PASSWORD_LEN {
        bytes.push(pick(&mut rng, &all));
    }
    bytes.shuffle(&mut rng);
    bytes.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_length_and_every_class() {
        for _ in 0..200 {
            let pw = generate_password();
            assert_eq!(pw.len(), PASSWORD_LEN);
            let b = pw.as_bytes();
            assert!(b.iter().any(|c| LOWER.contains(c)), "{pw}");
            assert!(b.iter().any(|c| UPPER.contains(c)), "{pw}");
            assert!(b.iter().any(|c| DIGITS.contains(c)), "{pw}");
            assert!(b.iter().any(|c| SYMBOLS.contains(c)), "{pw}");
        }
    }

    #[test]
    fn only_uses_known_characters() {
        let pw = generate_password();
        assert!(pw.bytes().all(|c| {
            LOWER.contains(&c) || UPPER.contains(&c) || DIGITS.contains(&c) || SYMBOLS.contains(&c)
        }));
    }

    #[test]
    fn successive_passwords_differ() {
        assert_ne!(generate_password(), generate_password());
    }
}
