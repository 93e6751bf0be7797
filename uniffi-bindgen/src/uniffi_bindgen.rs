//! Generates Kotlin and Swift bindings for `miniapp-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
