fn main() {
    // ESP-IDF link arguments and sysenv are only needed for the device build.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
