fn main() -> std::process::ExitCode {
    admin_reconcile::run()
}
