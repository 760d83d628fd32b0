use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("peerwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: peerwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("PEERWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "protocol: {} {}",
        String::from_utf8_lossy(peerwire_socket::PROTOCOL_NAME),
        peerwire_socket::PROTOCOL_VERSION
    );
    println!("max_age_secs: {}", peerwire_router::DEFAULT_MAX_AGE.as_secs());
    println!("features: router={}, cli=true", cfg!(feature = "router"));

    Ok(SUCCESS)
}
