use std::io::{self, BufRead, Write};

/// Program-visible text I/O.
pub struct Console<'a> {
    input: Box<dyn BufRead + 'a>,
    output: Box<dyn Write + 'a>,
}

impl<'a> Console<'a> {
    pub fn new(input: impl BufRead + 'a, output: impl Write + 'a) -> Self {
        Console {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    pub fn say(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.write_all(bytes)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    /// Read one line and keep at most `max` bytes of it. The line terminator
    /// is dropped; end of input gives an empty line.
    pub fn read_line(&mut self, max: usize) -> io::Result<Vec<u8>> {
        self.output.flush()?;
        let mut line = Vec::new();
        self.input.read_until(b'\n', &mut line)?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        line.truncate(max);
        Ok(line)
    }
}

impl Console<'static> {
    pub fn stdio() -> Self {
        Console::new(io::stdin().lock(), io::stdout())
    }
}
