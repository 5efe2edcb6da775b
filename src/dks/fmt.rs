//! Formatted appends, quoted representations and argument splitting.
use super::Dks;
use crate::databox::Databox;
use crate::error::{Error, Result};

/// Argument consumed by one directive of [`Dks::cat_fmt()`].
#[derive(Clone, Copy, Debug)]
pub enum FmtArg<'a> {
    /// Consumed by `%s`.
    Str(&'a str),
    /// Consumed by `%S`.
    Dks(&'a Dks),
    /// Consumed by `%i`.
    I32(i32),
    /// Consumed by `%I`.
    I64(i64),
    /// Consumed by `%u`.
    U32(u32),
    /// Consumed by `%U`.
    U64(u64),
    /// Consumed by `%b` if it holds bytes, and by `%B` if it holds bytes or a number.
    Box(&'a Databox<'a>),
}

impl FmtArg<'_> {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Dks(_) => "dks",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::Box(_) => "databox",
        }
    }
}

fn mismatch(expected: &'static str, arg: &FmtArg<'_>) -> Error {
    let found = match arg {
        FmtArg::Box(b) => b.type_name(),
        _ => arg.type_name(),
    };
    Error::TypeMismatch { expected, found }
}

fn render_box(out: &mut Vec<u8>, b: &Databox<'_>) -> Result<()> {
    match b {
        Databox::Bytes(bytes) => out.extend_from_slice(bytes),
        Databox::Signed(v) => out.extend_from_slice(v.to_string().as_bytes()),
        Databox::Unsigned(v) => out.extend_from_slice(v.to_string().as_bytes()),
        Databox::Float32(v) => out.extend_from_slice(v.to_string().as_bytes()),
        Databox::Double64(v) => out.extend_from_slice(v.to_string().as_bytes()),
        other => {
            return Err(Error::TypeMismatch {
                expected: "bytes or number",
                found: other.type_name(),
            })
        }
    }
    Ok(())
}

impl Dks {
    /// Appends `fmt` with its directives replaced by `args` in order.
    ///
    /// Directives are `%s`, `%S`, `%i`, `%I`, `%u`, `%U`, `%b`, `%B` and `%%`; any other
    /// `%c` appends `c`, and a trailing `%` is dropped. The string is unchanged on error.
    ///
    /// # Errors
    ///
    /// An error is returned if a directive has no argument left or its argument is of
    /// another kind.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::dks::{Dks, FmtArg};
    /// use datakit::Databox;
    ///
    /// let mut s = Dks::new(b"> ");
    /// let name = Dks::new(b"x");
    /// let weight = Databox::from(2.5f64);
    /// s.cat_fmt(
    ///     "%S=%I, %u%% of %B",
    ///     &[FmtArg::Dks(&name), FmtArg::I64(-3), FmtArg::U32(40), FmtArg::Box(&weight)],
    /// )?;
    /// assert_eq!(s.as_bytes(), b"> x=-3, 40% of 2.5");
    /// # Ok(())
    /// # }
    /// ```
    pub fn cat_fmt(&mut self, fmt: &str, args: &[FmtArg<'_>]) -> Result<()> {
        let mut out = Vec::with_capacity(fmt.len());
        let mut next_arg = args.iter();
        let mut bytes = fmt.bytes();
        while let Some(b) = bytes.next() {
            if b != b'%' {
                out.push(b);
                continue;
            }
            let Some(directive) = bytes.next() else {
                break;
            };
            if !b"sSiIuUbB".contains(&directive) {
                out.push(directive);
                continue;
            }
            let arg = next_arg.next().ok_or(Error::OutOfRange {
                index: args.len() as i64,
                len: args.len(),
            })?;
            match (directive, arg) {
                (b's', FmtArg::Str(v)) => out.extend_from_slice(v.as_bytes()),
                (b'S', FmtArg::Dks(v)) => out.extend_from_slice(v.as_bytes()),
                (b'i', FmtArg::I32(v)) => out.extend_from_slice(v.to_string().as_bytes()),
                (b'I', FmtArg::I64(v)) => out.extend_from_slice(v.to_string().as_bytes()),
                (b'u', FmtArg::U32(v)) => out.extend_from_slice(v.to_string().as_bytes()),
                (b'U', FmtArg::U64(v)) => out.extend_from_slice(v.to_string().as_bytes()),
                (b'b', FmtArg::Box(v)) => {
                    let bytes = v.as_bytes().ok_or_else(|| mismatch("bytes", arg))?;
                    out.extend_from_slice(bytes);
                }
                (b'B', FmtArg::Box(v)) => render_box(&mut out, v)?,
                (b's', _) => return Err(mismatch("str", arg)),
                (b'S', _) => return Err(mismatch("dks", arg)),
                (b'i', _) => return Err(mismatch("i32", arg)),
                (b'I', _) => return Err(mismatch("i64", arg)),
                (b'u', _) => return Err(mismatch("u32", arg)),
                (b'U', _) => return Err(mismatch("u64", arg)),
                _ => return Err(mismatch("databox", arg)),
            }
        }
        self.cat_len(&out);
        Ok(())
    }

    /// Appends `p` as a double-quoted literal that [`Dks::split_args()`] parses back.
    ///
    /// Quotes, backslashes and the usual control characters are escaped, other printable
    /// ASCII is kept, and every remaining byte becomes `\xhh`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let mut s = Dks::empty();
    /// s.cat_repr(b"a\"b\n\x01");
    /// assert_eq!(s.as_bytes(), br#""a\"b\n\x01""#);
    /// ```
    pub fn cat_repr(&mut self, p: &[u8]) {
        let mut out = Vec::with_capacity(p.len() + 2);
        out.push(b'"');
        for &b in p {
            match b {
                b'\\' | b'"' => out.extend_from_slice(&[b'\\', b]),
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                0x07 => out.extend_from_slice(b"\\a"),
                0x08 => out.extend_from_slice(b"\\b"),
                0x20..=0x7e => out.push(b),
                _ => out.extend_from_slice(format!("\\x{b:02x}").as_bytes()),
            }
        }
        out.push(b'"');
        self.cat_len(&out);
    }

    /// Splits a command line into arguments.
    ///
    /// Arguments are separated by whitespace and may be double-quoted, with `\xhh` and
    /// the escapes of [`Dks::cat_repr()`], or single-quoted, where only `\'` is an
    /// escape. Input stops at the first zero byte.
    ///
    /// # Errors
    ///
    /// An error is returned if a quote is unbalanced or a closing quote is followed by
    /// anything but whitespace.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::Dks;
    ///
    /// let args = Dks::split_args(br#"set "a key\x21" 'it\'s' 10"#)?;
    /// let args: Vec<_> = args.iter().map(|a| a.as_bytes()).collect();
    /// assert_eq!(args, vec![&b"set"[..], b"a key!", b"it's", b"10"]);
    ///
    /// assert!(Dks::split_args(br#""foo"bar"#).is_err());
    /// assert!(Dks::split_args(b"'open").is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn split_args(line: &[u8]) -> Result<Vec<Dks>> {
        let end = line.iter().position(|&b| b == 0).unwrap_or(line.len());
        let line = &line[..end];
        let is_space = |b: Option<&u8>| b.map_or(false, |b| b" \t\n\x0b\x0c\r".contains(b));
        let mut args = vec![];
        let mut p = 0;
        loop {
            while is_space(line.get(p)) {
                p += 1;
            }
            if p >= line.len() {
                return Ok(args);
            }
            let mut current = Dks::empty();
            let mut in_double = false;
            let mut in_single = false;
            loop {
                let c = line.get(p).copied();
                if in_double {
                    let Some(c) = c else {
                        return Err(Error::InvalidEncoding("unbalanced double quotes.".into()));
                    };
                    let hex = line.get(p + 2..p + 4).filter(|h| {
                        c == b'\\' && line[p + 1] == b'x' && h.iter().all(u8::is_ascii_hexdigit)
                    });
                    if let Some(h) = hex {
                        let byte = std::str::from_utf8(h)
                            .ok()
                            .and_then(|h| u8::from_str_radix(h, 16).ok())
                            .unwrap_or_default();
                        current.cat_len(&[byte]);
                        p += 3;
                    } else if c == b'\\' && p + 1 < line.len() {
                        p += 1;
                        let escaped = match line[p] {
                            b'n' => b'\n',
                            b'r' => b'\r',
                            b't' => b'\t',
                            b'b' => 0x08,
                            b'a' => 0x07,
                            other => other,
                        };
                        current.cat_len(&[escaped]);
                    } else if c == b'"' {
                        if p + 1 < line.len() && !is_space(line.get(p + 1)) {
                            return Err(Error::InvalidEncoding(format!(
                                "closing quote at {p} must be followed by a space."
                            )));
                        }
                        p += 1;
                        break;
                    } else {
                        current.cat_len(&[c]);
                    }
                } else if in_single {
                    let Some(c) = c else {
                        return Err(Error::InvalidEncoding("unbalanced single quotes.".into()));
                    };
                    if c == b'\\' && line.get(p + 1) == Some(&b'\'') {
                        p += 1;
                        current.cat_len(b"'");
                    } else if c == b'\'' {
                        if p + 1 < line.len() && !is_space(line.get(p + 1)) {
                            return Err(Error::InvalidEncoding(format!(
                                "closing quote at {p} must be followed by a space."
                            )));
                        }
                        p += 1;
                        break;
                    } else {
                        current.cat_len(&[c]);
                    }
                } else {
                    match c {
                        None | Some(b' ' | b'\n' | b'\r' | b'\t') => {
                            if c.is_some() {
                                p += 1;
                            }
                            break;
                        }
                        Some(b'"') => in_double = true,
                        Some(b'\'') => in_single = true,
                        Some(c) => current.cat_len(&[c]),
                    }
                }
                p += 1;
            }
            args.push(current);
        }
    }
}
