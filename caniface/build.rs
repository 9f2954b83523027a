/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
extern crate bindgen;
extern crate cc;

use std::env;
use std::path::PathBuf;

fn main() {
    // add here any special search path specific to your configuration
    println!("cargo:rustc-link-search=/usr/local/lib64");

    // invalidate the built crate whenever the wrapper changes
    println!("cargo:rerun-if-changed=src/capi/caniface-map.h");
    println!("cargo:rerun-if-changed=src/capi/caniface-glue.c");

    let header = "
    // -----------------------------------------------------------------------
    //         <- private 'caniface' Rust/C unsafe binding ->
    // -----------------------------------------------------------------------
    //   Do not exit this file it will be regenerated automatically by cargo.
    //   Check:
    //     - build.rs at project root for dynamically mapping
    //     - src/capi/caniface-map.h for static values
    // -----------------------------------------------------------------------
    ";

    // small C shim for calls whose glibc prototypes do not map cleanly (sockaddr_can, msghdr, pollfd)
    cc::Build::new()
        .file("src/capi/caniface-glue.c")
        .warnings(true)
        .compile("caniface-glue");

    let caniface = bindgen::Builder::default()
        // main entry point for wrapper
        .header("src/capi/caniface-map.h")
        .raw_line(header)
        // default wrapper config
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .derive_debug(false)
        .layout_tests(false)
        .prepend_enum_name(false)
        .allowlist_function("can_.*")
        .allowlist_function("__errno_location")
        .allowlist_function("socket")
        .allowlist_function("setsockopt")
        .allowlist_function("if_nametoindex")
        .allowlist_function("fcntl")
        .allowlist_function("write")
        .allowlist_function("close")
        .allowlist_type("can_.*")
        .allowlist_var("can_.*")
        // generate caniface wrapper
        .generate()
        .expect("Unable to generate caniface");

    let out_path = PathBuf::from(env::var("OUT_DIR").expect("cargo did not set OUT_DIR"));
    caniface
        .write_to_file(out_path.join("caniface-map.rs"))
        .expect("Couldn't write caniface!");
}
