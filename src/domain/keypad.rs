use std::fmt;

/// A single key from the 3x4 terminal keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    /// `*`, used as backspace.
    Star,
    /// `#`, used as confirm.
    Hash,
}

impl Key {
    pub fn as_char(&self) -> char {
        match self {
            Key::Digit(d) => char::from(b'0' + d),
            Key::Star => '*',
            Key::Hash => '#',
        }
    }

    pub fn digit(&self) -> Option<u8> {
        match self {
            Key::Digit(d) => Some(*d),
            _ => None,
        }
    }
}

impl TryFrom<char> for Key {
    type Error = char;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '0'..='9' => Ok(Key::Digit(c as u8 - b'0')),
            '*' => Ok(Key::Star),
            '#' => Ok(Key::Hash),
            other => Err(other),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Result of applying one key to a [`DigitBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Appended,
    Removed,
    Confirmed(String),
    Ignored,
}

impl Edit {
    /// True when the visible buffer content changed or was committed.
    pub fn is_publishable(&self) -> bool {
        !matches!(self, Edit::Ignored)
    }
}

/// Append/backspace/confirm digit editing shared by account number, code and
/// amount entry.
#[derive(Debug, Clone)]
pub struct DigitBuffer {
    digits: String,
    max_len: usize,
    min_confirm: usize,
    exact: bool,
    allow_leading_zero: bool,
}

impl DigitBuffer {
    /// Code entry: exactly `len` digits must be present before `#` is accepted.
    pub fn code(len: usize) -> Self {
        Self {
            digits: String::with_capacity(len),
            max_len: len,
            min_confirm: len,
            exact: true,
            allow_leading_zero: true,
        }
    }

    /// Variable-length number entry, confirmed with at least one digit.
    pub fn number(max_len: usize) -> Self {
        Self {
            digits: String::new(),
            max_len,
            min_confirm: 1,
            exact: false,
            allow_leading_zero: true,
        }
    }

    /// Amount entry: like [`DigitBuffer::number`] but a leading `0` is rejected.
    pub fn amount(max_len: usize) -> Self {
        Self {
            allow_leading_zero: false,
            ..Self::number(max_len)
        }
    }

    pub fn apply(&mut self, key: Key) -> Edit {
        match key {
            Key::Digit(d) => {
                if self.digits.len() >= self.max_len {
                    return Edit::Ignored;
                }
                if d == 0 && self.digits.is_empty() && !self.allow_leading_zero {
                    return Edit::Ignored;
                }
                self.digits.push(key.as_char());
                Edit::Appended
            }
            Key::Star => {
                if self.digits.pop().is_some() {
                    Edit::Removed
                } else {
                    Edit::Ignored
                }
            }
            Key::Hash => {
                let len = self.digits.len();
                let ready = if self.exact {
                    len == self.min_confirm
                } else {
                    len >= self.min_confirm
                };
                if ready {
                    Edit::Confirmed(self.digits.clone())
                } else {
                    Edit::Ignored
                }
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn masked(&self) -> String {
        "*".repeat(self.digits.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buffer: &mut DigitBuffer, script: &str) -> Vec<Edit> {
        script
            .chars()
            .map(|c| buffer.apply(Key::try_from(c).unwrap()))
            .collect()
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!(Key::try_from('7'), Ok(Key::Digit(7)));
        assert_eq!(Key::try_from('*'), Ok(Key::Star));
        assert_eq!(Key::try_from('#'), Ok(Key::Hash));
        assert_eq!(Key::try_from('A'), Err('A'));
        assert_eq!(Key::Digit(0).as_char(), '0');
    }

    #[test]
    fn test_code_requires_exact_length() {
        let mut buffer = DigitBuffer::code(4);
        let edits = feed(&mut buffer, "12#");
        assert_eq!(edits.last(), Some(&Edit::Ignored));

        let edits = feed(&mut buffer, "345#");
        // fifth digit is dropped, confirm sees "1234"
        assert_eq!(edits[2], Edit::Ignored);
        assert_eq!(edits[3], Edit::Confirmed("1234".to_string()));
    }

    #[test]
    fn test_backspace() {
        let mut buffer = DigitBuffer::code(4);
        feed(&mut buffer, "98");
        assert_eq!(buffer.apply(Key::Star), Edit::Removed);
        assert_eq!(buffer.as_str(), "9");
        assert_eq!(buffer.apply(Key::Star), Edit::Removed);
        assert_eq!(buffer.apply(Key::Star), Edit::Ignored);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_amount_rejects_leading_zero() {
        let mut buffer = DigitBuffer::amount(6);
        assert_eq!(buffer.apply(Key::Digit(0)), Edit::Ignored);
        assert_eq!(buffer.apply(Key::Digit(5)), Edit::Appended);
        assert_eq!(buffer.apply(Key::Digit(0)), Edit::Appended);
        assert_eq!(buffer.as_str(), "50");
    }

    #[test]
    fn test_amount_caps_length() {
        let mut buffer = DigitBuffer::amount(6);
        feed(&mut buffer, "123456789");
        assert_eq!(buffer.as_str(), "123456");
        assert_eq!(buffer.apply(Key::Hash), Edit::Confirmed("123456".into()));
    }

    #[test]
    fn test_number_confirm_needs_a_digit() {
        let mut buffer = DigitBuffer::number(24);
        assert_eq!(buffer.apply(Key::Hash), Edit::Ignored);
        feed(&mut buffer, "0042");
        assert_eq!(buffer.apply(Key::Hash), Edit::Confirmed("0042".into()));
        assert_eq!(buffer.masked(), "****");
    }
}
