mod shell;

fn main() {
    env_logger::init();
    // Relative lookup only: commands come from ./bin or the working
    // directory until a setenv says otherwise.
    std::env::set_var("PATH", "bin:.");
    let mut s = shell::Shell::new();
    s.run_interactive();
}
