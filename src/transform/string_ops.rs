use std::borrow::Cow;

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Returns an uppercase representation, avoiding allocation when unnecessary.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

/// Trims leading/trailing whitespace while borrowing the original.
pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Capitalizes the first letter of every alphabetic run and lowercases the rest.
///
/// Any non-alphabetic character starts a new word, so `o'neil-smith` becomes
/// `O'Neil-Smith` and `3rd avenue` becomes `3Rd Avenue`.
pub fn titlecase(input: &str) -> Cow<'_, str> {
    let mut output = String::with_capacity(input.len());
    let mut in_word = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if in_word {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            output.push(ch);
            in_word = false;
        }
    }
    if output == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(output)
    }
}

/// Keeps ASCII digits only.
pub fn digits_only(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| ch.is_ascii_digit()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.chars().filter(char::is_ascii_digit).collect())
    }
}
