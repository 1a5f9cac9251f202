#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use imgwarden_scanner::source::image_ref::parse_image_reference;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    image: String,
    image_id: String,
}

fuzz_target!(|input: FuzzInput| {
    if let Some(reference) = parse_image_reference(&input.image, &input.image_id) {
        assert!(!reference.digest.is_empty());
        assert!(!reference.repository.is_empty());
        assert!(!reference.tag.is_empty());
        assert!(!reference.repository.ends_with('/'));
    }
});
