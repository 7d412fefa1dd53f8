use std::io::{self, BufRead, Write};

/// `y`/`yes` or `n`/`no`, any case, surrounding whitespace ignored.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Ask until the operator gives a yes/no answer. End of input counts as "no".
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{} (yes/no): ", question)?;
    loop {
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }
        match parse_answer(&line) {
            Some(answer) => return Ok(answer),
            None => write!(output, "Please type (y)es or (n)o and then press enter: ")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn answers() {
        for yes in ["y", "Y", "yes", "YES", " Yes \r\n"] {
            assert_eq!(parse_answer(yes), Some(true), "{:?}", yes);
        }
        for no in ["n", "No", "NO\n"] {
            assert_eq!(parse_answer(no), Some(false), "{:?}", no);
        }
        for junk in ["", "yep", "nope", "1"] {
            assert_eq!(parse_answer(junk), None, "{:?}", junk);
        }
    }

    #[test]
    fn reprompts_until_valid() {
        let mut input = Cursor::new("maybe\n\nyes\n");
        let mut out = Vec::new();
        assert!(confirm(&mut input, &mut out, "Write hosts?").unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Write hosts? (yes/no): "));
        assert_eq!(text.matches("Please type").count(), 2);
    }

    #[test]
    fn eof_means_no() {
        let mut input = Cursor::new("what\n");
        let mut out = Vec::new();
        assert!(!confirm(&mut input, &mut out, "Write hosts?").unwrap());
    }
}
