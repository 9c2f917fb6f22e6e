//! Terminal prompt for the edit-sequence choice.

use std::io::{self, BufRead, Write};

use clayfab::{EditSequence, FabError, FabricationElement, Operator, parse_selection};

/// Asks on stdout, reads answers from stdin.
pub struct StdinOperator;

impl StdinOperator {
    fn ask(&self, prompt: &str) -> Result<String, FabError> {
        tokio::task::block_in_place(|| {
            let mut out = io::stdout().lock();
            write!(out, "{}", prompt).and_then(|_| out.flush()).map_err(stdin_error)?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map_err(stdin_error)?;
            Ok(line.trim().to_string())
        })
    }
}

fn stdin_error(e: io::Error) -> FabError {
    FabError::Validation(format!("could not read operator input: {}", e))
}

impl Operator for StdinOperator {
    fn choose_sequence(&mut self, elements: &[FabricationElement]) -> Result<EditSequence, FabError> {
        let placed: Vec<usize> = elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.placed)
            .map(|(i, _)| i)
            .collect();
        let highest = placed.last().copied().unwrap_or(0);
        println!(
            "{} of {} elements are marked as placed (highest index {}).",
            placed.len(),
            elements.len(),
            highest
        );
        println!("  a) place everything");
        println!("  b) place everything after index {}", highest);
        println!("  c) start at a given index");
        println!("  d) select indices to place");

        loop {
            let choice = self.ask("Choice [b]: ")?.to_lowercase();
            match choice.as_str() {
                "a" => return Ok(EditSequence::PlaceAll),
                "" | "b" => return Ok(EditSequence::RespectPlaced),
                "c" => {
                    let answer = self.ask(&format!("Start index [0-{}]: ", elements.len().saturating_sub(1)))?;
                    match answer.parse::<usize>() {
                        Ok(i) if i < elements.len() => return Ok(EditSequence::StartAt(i)),
                        _ => println!("Not an index: '{}'", answer),
                    }
                }
                "d" => {
                    let answer = self.ask("Indices to place, e.g. 0-3,7: ")?;
                    match parse_selection(&answer, elements.len()) {
                        Ok(selection) => return Ok(EditSequence::Selection(selection)),
                        Err(e) => println!("{}", e),
                    }
                }
                other => println!("Unknown choice '{}'", other),
            }
        }
    }
}
