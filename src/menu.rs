use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Individual,
    Consolidated,
    Exit,
}

impl MenuChoice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Individual),
            "2" => Some(MenuChoice::Consolidated),
            "3" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

fn print_menu<W: Write>(output: &mut W) -> io::Result<()> {
    writeln!(output)?;
    writeln!(output, "{}", "=".repeat(30))?;
    writeln!(output, "   NO-SHOW ANALYSIS MENU")?;
    writeln!(output, "{}", "=".repeat(30))?;
    writeln!(output, "1. Generate INDIVIDUAL reports for each patient")?;
    writeln!(output, "2. Generate the CONSOLIDATED clinic report")?;
    writeln!(output, "3. Exit")?;
    write!(output, "\nEnter your choice (1, 2 or 3): ")?;
    output.flush()
}

/// Prompts until a valid option is entered. End of input counts as exit.
pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<MenuChoice> {
    loop {
        print_menu(output)?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(MenuChoice::Exit);
        }

        match MenuChoice::parse(&line) {
            Some(choice) => return Ok(choice),
            None => writeln!(output, "Invalid option. Please choose 1, 2 or 3.")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(input: &str) -> (MenuChoice, String) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        let choice = prompt(&mut reader, &mut output).unwrap();
        (choice, String::from_utf8(output).unwrap())
    }

    #[test]
    fn accepts_each_option() {
        assert_eq!(run("1\n").0, MenuChoice::Individual);
        assert_eq!(run(" 2 \n").0, MenuChoice::Consolidated);
        assert_eq!(run("3\n").0, MenuChoice::Exit);
    }

    #[test]
    fn reprompts_on_invalid_input() {
        let (choice, output) = run("9\nabc\n2\n");
        assert_eq!(choice, MenuChoice::Consolidated);
        assert_eq!(output.matches("Invalid option").count(), 2);
        assert_eq!(output.matches("NO-SHOW ANALYSIS MENU").count(), 3);
    }

    #[test]
    fn end_of_input_exits() {
        assert_eq!(run("").0, MenuChoice::Exit);
        assert_eq!(run("7\n").0, MenuChoice::Exit);
    }
}
