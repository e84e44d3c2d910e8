//! Check command implementation.
//!
//! Validates system requirements and configuration.

use std::path::Path;

use crate::config::{validate_effective_config, Config};
use crate::docker::DockerCli;
use crate::exec::command_exists;
use crate::process::collect_proc_entries;
use crate::system::{cpu_count, read_boot_time, read_meminfo};

/// Validates system requirements and configuration.
pub fn command_check(proc: bool, docker: bool, all: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Leak Guard - System Check");
    println!("=====================================");

    let mut all_ok = true;
    let proc_root = Path::new("/proc");

    if proc || all {
        println!("\n📁 Checking /proc filesystem...");
        let entries = collect_proc_entries(proc_root);
        if entries.is_empty() {
            println!("   ❌ Cannot read any process entries from /proc");
            all_ok = false;
        } else {
            println!("   ✅ Can read {} process entries", entries.len());
        }

        match read_meminfo(proc_root) {
            Ok(mem) => println!(
                "   ✅ meminfo: total={}MB usage={:.1}% ({} CPUs)",
                mem.total_bytes / 1024 / 1024,
                mem.usage_pct(),
                cpu_count()
            ),
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }

        match read_boot_time(proc_root) {
            Ok(_) => println!("   ✅ Boot time available (process start times resolvable)"),
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    if docker || all {
        println!("\n🐳 Checking docker...");
        if !command_exists("docker") {
            println!("   ⚠️  docker binary not found - container monitoring would be disabled");
        } else {
            match DockerCli::default().stats() {
                Ok(containers) => println!("   ✅ docker stats works ({} running containers)", containers.len()),
                Err(e) => {
                    println!("   ❌ docker stats failed: {}", e);
                    all_ok = false;
                }
            }
        }
    }

    if all {
        println!("\n🔔 Checking notifications...");
        if command_exists("notify-send") {
            println!("   ✅ notify-send available");
        } else {
            println!("   ⚠️  notify-send not found - recidivism alerts go to the event log only");
        }
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            let s = config.to_settings();
            println!("   ✅ Configuration is valid");
            println!(
                "   mode={} slope>{}MB/min growth>{}MB conf={} high={}% low={}%",
                s.mode, s.slope_mb_per_min, s.growth_mb, s.confirmations, s.high_pct, s.low_pct
            );
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
