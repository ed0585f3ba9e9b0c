// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Line number spacing for received BASIC listings.

use std::borrow::Cow;

/// Insert one space after a leading line number that runs straight into the
/// statement, e.g. `10PRINT` becomes `10 PRINT`.
///
/// Leading spaces are skipped. Nothing changes when there is no digit run,
/// when the line ends right after it, or when a space or tab already follows.
pub fn insert_digit_space(line: &[u8]) -> Cow<'_, [u8]> {
    let digits_start = line.iter().take_while(|&&b| b == b' ').count();
    let digits_end = digits_start
        + line[digits_start..].iter().take_while(|b| b.is_ascii_digit()).count();

    match line.get(digits_end) {
        Some(&next) if digits_end > digits_start && next != b' ' && next != b'\t' => {
            let mut spaced = Vec::with_capacity(line.len() + 1);
            spaced.extend_from_slice(&line[..digits_end]);
            spaced.push(b' ');
            spaced.extend_from_slice(&line[digits_end..]);
            Cow::Owned(spaced)
        }
        _ => Cow::Borrowed(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn spaced(line: &[u8]) -> Vec<u8> {
        insert_digit_space(line).into_owned()
    }

    #[test]
    fn test_inserts_space_after_line_number() {
        assert_eq!(spaced(b"12hello"), b"12 hello");
        assert_eq!(spaced(b"10PRINT \"HI\""), b"10 PRINT \"HI\"");
        assert_eq!(spaced(b"  20GOTO 10"), b"  20 GOTO 10");
    }

    #[test]
    fn test_existing_separator_kept() {
        assert_eq!(spaced(b"12  hello"), b"12  hello");
        assert_eq!(spaced(b"12 hello"), b"12 hello");
        assert_eq!(spaced(b"12\thello"), b"12\thello");
    }

    #[test]
    fn test_lines_without_leading_number_unchanged() {
        assert!(matches!(insert_digit_space(b"PRINT 10"), Cow::Borrowed(_)));
        assert_eq!(spaced(b""), b"");
        assert_eq!(spaced(b"   "), b"   ");
        assert_eq!(spaced(b"\t10A"), b"\t10A");
        assert_eq!(spaced(b"x12y"), b"x12y");
    }

    #[test]
    fn test_number_alone_unchanged() {
        assert_eq!(spaced(b"100"), b"100");
        assert_eq!(spaced(b"  7"), b"  7");
    }

    #[test]
    fn test_only_leading_run_considered() {
        assert_eq!(spaced(b"1A2B"), b"1 A2B");
        assert_eq!(spaced(b"1:2:3"), b"1 :2:3");
    }

    proptest! {
        #[test]
        fn prop_numbered_lines_get_exactly_one_separator(
            indent in 0usize..4,
            number in "[0-9]{1,5}",
            rest in "[A-Za-z\"(][ -~]{0,20}",
        ) {
            let mut line = vec![b' '; indent];
            line.extend_from_slice(number.as_bytes());
            line.extend_from_slice(rest.as_bytes());

            let mut expected = vec![b' '; indent];
            expected.extend_from_slice(number.as_bytes());
            expected.push(b' ');
            expected.extend_from_slice(rest.as_bytes());

            prop_assert_eq!(spaced(&line), expected);
        }

        #[test]
        fn prop_already_separated_lines_unchanged(
            number in "[0-9]{1,5}",
            sep in "[ \t]",
            rest in "[ -~]{0,20}",
        ) {
            let line = format!("{number}{sep}{rest}").into_bytes();
            prop_assert_eq!(spaced(&line), line);
        }

        #[test]
        fn prop_identity_without_leading_digits(
            line in proptest::collection::vec(any::<u8>(), 0..40),
        ) {
            let first = line.iter().copied().find(|&b| b != b' ');
            prop_assume!(!matches!(first, Some(b) if b.is_ascii_digit()));
            prop_assert_eq!(spaced(&line), line);
        }
    }
}
