//! Colored console output macros
//!
//! Terminal coloring is decorative: every termcolor call ignores its error
//! with `let _ =`, so a closed pipe or missing TTY degrades to plain text
//! (or nothing) instead of failing the command.

/// Shared body of the colored macros: colored prefix, plain message
#[doc(hidden)]
#[macro_export]
macro_rules! __colored_line {
    ($writer:ident, $color:ident, $prefix:expr, $($arg:tt)*) => {{
        use std::io::Write as _;
        use termcolor::WriteColor as _;
        let bufwtr = termcolor::BufferWriter::$writer(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::$color)));
        let _ = write!(&mut buffer, "{}", $prefix);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Yellow warning on stderr
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__colored_line!(stderr, Yellow, "⚠️  ", $($arg)*)
    };
}

/// Red error on stderr
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__colored_line!(stderr, Red, "❌ ", $($arg)*)
    };
}

/// Green confirmation on stdout
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::__colored_line!(stdout, Green, "✓ ", $($arg)*)
    };
}

/// Print a line only when the configured verbosity reaches `level`
#[macro_export]
macro_rules! verbose {
    ($output:expr, $level:expr, $($arg:tt)*) => {{
        if $output.verbosity >= $level {
            println!($($arg)*);
        }
    }};
}
