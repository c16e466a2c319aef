use std::process::ExitCode;

fn main() -> ExitCode {
    revision_diff::main()
}
