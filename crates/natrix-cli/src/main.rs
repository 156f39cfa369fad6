use std::{
    env, fs,
    io::{self, Read as _},
    process::ExitCode,
};

use natrix::{Object, Runner, StdIo};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let (name, code) = match args.get(1).map(String::as_str) {
        Some("-") | None => {
            let mut code = String::new();
            if let Err(err) = io::stdin().read_to_string(&mut code) {
                eprintln!("error: failed to read stdin: {err}");
                return ExitCode::FAILURE;
            }
            ("<stdin>".to_owned(), code)
        }
        Some(path) => match fs::read_to_string(path) {
            Ok(code) => (path.to_owned(), code),
            Err(err) => {
                eprintln!("error: failed to read {path}: {err}");
                return ExitCode::FAILURE;
            }
        },
    };

    let runner = match Runner::new(code) {
        Ok(runner) => runner,
        Err(err) => {
            eprintln!("{name}:\n{err}");
            return ExitCode::FAILURE;
        }
    };

    match runner.run_with(&mut StdIo) {
        Ok(Object::None) => ExitCode::SUCCESS,
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err.render(runner.source()));
            ExitCode::FAILURE
        }
    }
}
