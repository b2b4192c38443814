use std::fmt;

/// The category code of a character.
///
/// Category codes govern how the lexer turns a character into a token.
/// Every character has exactly one category code at any point in time; the
/// codes are mutable, scoped state.
///
/// The first 14 variants match the historical numbering (0 through 13);
/// [Comment](CatCode::Comment) and [Invalid](CatCode::Invalid) are 14 and 15.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CatCode {
    Escape = 0,
    BeginGroup = 1,
    EndGroup = 2,
    MathShift = 3,
    AlignmentTab = 4,
    EndOfLine = 5,
    Parameter = 6,
    Superscript = 7,
    Subscript = 8,
    Ignored = 9,
    Space = 10,
    Letter = 11,
    #[default]
    Other = 12,
    Active = 13,
    Comment = 14,
    Invalid = 15,
}

impl CatCode {
    /// The standard category code assignment for the first 128 characters.
    ///
    /// `\` is the escape character, `{` and `}` open and close groups,
    /// `$` is the math shift, `&` the alignment tab, carriage return and
    /// newline end lines, `#` is the parameter character, `^` and `_` are
    /// superscript and subscript, the null byte is ignored, space and tab
    /// are spaces, ASCII letters are letters, `%` starts a comment, the
    /// delete character is invalid, and everything else is other.
    pub const STANDARD_DEFAULTS: [CatCode; 128] = {
        use CatCode::*;
        let mut table = [Other; 128];
        table['\\' as usize] = Escape;
        table['{' as usize] = BeginGroup;
        table['}' as usize] = EndGroup;
        table['$' as usize] = MathShift;
        table['&' as usize] = AlignmentTab;
        table['\r' as usize] = EndOfLine;
        table['\n' as usize] = EndOfLine;
        table['#' as usize] = Parameter;
        table['^' as usize] = Superscript;
        table['_' as usize] = Subscript;
        table['\x00' as usize] = Ignored;
        table[' ' as usize] = Space;
        table['\t' as usize] = Space;
        table['%' as usize] = Comment;
        table['\x7F' as usize] = Invalid;
        let mut c = 'A' as usize;
        while c <= 'Z' as usize {
            table[c] = Letter;
            c += 1;
        }
        let mut c = 'a' as usize;
        while c <= 'z' as usize {
            table[c] = Letter;
            c += 1;
        }
        table
    };

    /// Look a character up in the standard table. Characters outside the
    /// table are other.
    pub fn standard(c: char) -> CatCode {
        CatCode::STANDARD_DEFAULTS
            .get(c as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl TryFrom<u8> for CatCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use CatCode::*;
        Ok(match value {
            0 => Escape,
            1 => BeginGroup,
            2 => EndGroup,
            3 => MathShift,
            4 => AlignmentTab,
            5 => EndOfLine,
            6 => Parameter,
            7 => Superscript,
            8 => Subscript,
            9 => Ignored,
            10 => Space,
            11 => Letter,
            12 => Other,
            13 => Active,
            14 => Comment,
            15 => Invalid,
            _ => return Err(value),
        })
    }
}

impl fmt::Display for CatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CatCode::*;
        let name = match self {
            Escape => "escape",
            BeginGroup => "begin group",
            EndGroup => "end group",
            MathShift => "math shift",
            AlignmentTab => "alignment tab",
            EndOfLine => "end of line",
            Parameter => "parameter",
            Superscript => "superscript",
            Subscript => "subscript",
            Ignored => "ignored",
            Space => "space",
            Letter => "letter",
            Other => "other",
            Active => "active",
            Comment => "comment",
            Invalid => "invalid",
        };
        write!(f, "{} ({})", name, *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table() {
        assert_eq!(CatCode::standard('\\'), CatCode::Escape);
        assert_eq!(CatCode::standard('{'), CatCode::BeginGroup);
        assert_eq!(CatCode::standard('}'), CatCode::EndGroup);
        assert_eq!(CatCode::standard('a'), CatCode::Letter);
        assert_eq!(CatCode::standard('Z'), CatCode::Letter);
        assert_eq!(CatCode::standard('1'), CatCode::Other);
        assert_eq!(CatCode::standard(' '), CatCode::Space);
        assert_eq!(CatCode::standard('%'), CatCode::Comment);
        assert_eq!(CatCode::standard('ß'), CatCode::Other);
    }

    #[test]
    fn round_trip_through_u8() {
        for u in 0..16_u8 {
            let cat_code = CatCode::try_from(u).unwrap();
            assert_eq!(cat_code as u8, u);
        }
        assert_eq!(CatCode::try_from(16), Err(16));
    }
}
