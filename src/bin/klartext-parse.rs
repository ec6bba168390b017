use std::{env, fs, process};
use klartext::build::Status;
use klartext::parse::parse;

fn main() {
    let filename = env::args().nth(1).expect("file name required");
    let input = fs::read_to_string(&filename).unwrap();

    let result = parse(&filename, &input);
    let status = Status::of(&result);
    match result {
        Err(e) => eprintln!("Parse error: {}", e),
        Ok(parsed) => {
            print!("{}", parsed.program);
            for diag in &parsed.diagnostics {
                eprintln!("{}", diag);
            }
        }
    }
    if status == Status::Failure {
        process::exit(1);
    }
}
