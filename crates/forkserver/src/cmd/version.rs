use forkserver_wire::{Opcode, MAX_CHUNK_SIZE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("forkserver {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: forkserver");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FORKSERVER_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "opcodes: {}",
        [Opcode::Error, Opcode::Reply, Opcode::Echo, Opcode::Resource]
            .iter()
            .map(|op| format!("{}={}", op.name(), op.value()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("max_chunk: {MAX_CHUNK_SIZE}");

    Ok(SUCCESS)
}
