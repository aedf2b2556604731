fn main() -> std::process::ExitCode {
  mmcpack_lib::run()
}
