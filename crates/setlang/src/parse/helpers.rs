//! Macros shared by the parsing code.

/// Reads the next token and matches it against the provided patterns.
///
/// On a match, the corresponding expression is returned in [Some].
/// Otherwise a recoverable parse error is raised, the token (if any) is
/// pushed back, and [None] is returned; the caller substitutes a default.
macro_rules! get_required_element {
    ($stream: expr, $expected: expr, $guidance: expr, $($pat: pat => $result: expr,)+) => {
        match ($stream).next()? {
            Some(token) => match token.value() {
                $(
                    $pat => Some($result),
                )+
                _ => {
                    ($stream).back(token);
                    ($stream).vm().error(
                        $crate::parse::Error::new($expected, Some(token), $guidance),
                    )?;
                    None
                }
            },
            None => {
                ($stream).vm().error(
                    $crate::parse::Error::new($expected, None, $guidance),
                )?;
                None
            }
        }
    };
}

/// Reads the next token and matches it against the provided patterns.
///
/// On a match, the corresponding expression is returned in [Some];
/// otherwise the token is pushed back and [None] is returned.
macro_rules! get_optional_element {
    ($stream: expr, $($pat: pat => $result: expr,)+) => {
        match ($stream).next()? {
            None => None,
            Some(token) => match token.value() {
                $(
                    $pat => Some($result),
                )+
                _ => {
                    ($stream).back(token);
                    None
                }
            }
        }
    };
}

/// Like [get_optional_element!], but also returns the matched token.
macro_rules! get_optional_element_with_token {
    ($stream: expr, $($pat: pat => $result: expr,)+) => {
        match ($stream).next()? {
            None => None,
            Some(token) => match token.value() {
                $(
                    $pat => Some(($result, token)),
                )+
                _ => {
                    ($stream).back(token);
                    None
                }
            }
        }
    };
}
