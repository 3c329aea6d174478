mod common;

#[cfg(test)]
mod index {
    use super::common::*;
    use simple_cache_reader::index::{MetadataLayout, SUPPORTED_INDEX_VERSION};
    use simple_cache_reader::{decode_index, FormatError};

    #[test]
    fn test_two_record_scenario() {
        let bytes = index_file(9, &[0x1122334455667788, 0x99AABBCCDDEEFF00]);
        let index = decode_index(&bytes, false).unwrap();
        assert_eq!(index.entry_hashes.len(), 2);
        assert!(index.entry_hashes.contains(&0x1122334455667788));
        assert!(index.entry_hashes.contains(&0x99AABBCCDDEEFF00));
        assert_eq!(index.entry_count, 2);
        assert_eq!(index.cache_size_bytes, 4096);
        assert_eq!(index.version, 9);
        assert_eq!(index.eviction_reason, Some(3));
    }

    #[test]
    fn test_payload_size_mismatch() {
        let mut bytes = index_file(9, &[1, 2, 3]);
        let declared = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        bytes[0..4].copy_from_slice(&(declared + 1).to_le_bytes());
        assert!(matches!(decode_index(&bytes, false), Err(FormatError::InvalidPayloadSize { .. })));

        let mut extended = index_file(9, &[1, 2, 3]);
        extended.push(0);
        assert!(matches!(decode_index(&extended, false), Err(FormatError::InvalidPayloadSize { .. })));
    }

    #[test]
    fn test_envelope_crc_mismatch() {
        let mut bytes = index_file(9, &[42]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x10;
        let err = decode_index(&bytes, false).unwrap_err();
        assert!(matches!(err, FormatError::Crc32Mismatch { region: "index payload", .. }));
        assert!(err.to_string().starts_with("crc32 mismatch"));

        let mut bad_crc = index_file(9, &[42]);
        bad_crc[4] ^= 0x01;
        assert!(matches!(decode_index(&bad_crc, false), Err(FormatError::Crc32Mismatch { .. })));
    }

    #[test]
    fn test_strict_rejects_newer_version() {
        let bytes = index_file(10, &[0xabc, 0xdef]);
        assert_eq!(
            decode_index(&bytes, true).unwrap_err(),
            FormatError::UnsupportedVersion { found: 10, supported: SUPPORTED_INDEX_VERSION }
        );

        let lenient = decode_index(&bytes, false).unwrap();
        assert_eq!(lenient.version, 10);
        assert_eq!(lenient.entry_hashes.len(), 2);
    }

    #[test]
    fn test_strict_accepts_supported_versions() {
        for version in [5, 6, 7, 8, 9] {
            let index = decode_index(&index_file(version, &[7]), true).unwrap();
            assert_eq!(index.version, version);
        }
    }

    #[test]
    fn test_pre_v7_metadata_has_no_eviction_reason() {
        let index = decode_index(&index_file(6, &[0x55, 0x66]), false).unwrap();
        assert_eq!(index.eviction_reason, None);
        assert_eq!(index.entry_hashes.len(), 2);
        assert!(index.contains(0x66));

        assert_eq!(MetadataLayout::for_version(6).size(), 28);
        assert_eq!(MetadataLayout::for_version(7).size(), 32);
    }

    #[test]
    fn test_duplicate_hashes_collapse() {
        let index = decode_index(&index_file(8, &[5, 5, 6]), false).unwrap();
        assert_eq!(index.entry_count, 3);
        assert_eq!(index.entry_hashes.len(), 2);
    }

    #[test]
    fn test_reads_exactly_entry_count_records() {
        // Chromium appends a last-modified timestamp after the table.
        let mut payload = index_payload(9, 1, 0, &[0x10, 0x20]);
        payload.extend_from_slice(&123u64.to_le_bytes());
        let index = decode_index(&wrap_envelope(&payload), false).unwrap();
        assert_eq!(index.entry_hashes.len(), 1);
        assert!(index.contains(0x10));
        assert!(!index.contains(0x20));
    }

    #[test]
    fn test_truncated_hash_table() {
        let payload = index_payload(9, 3, 0, &[1, 2]);
        let err = decode_index(&wrap_envelope(&payload), false).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { what: "index hash table", .. }));

        let huge = index_payload(9, u64::MAX, 0, &[1]);
        assert!(matches!(decode_index(&wrap_envelope(&huge), false), Err(FormatError::Truncated { .. })));
    }

    #[test]
    fn test_bad_metadata_magic() {
        let mut payload = index_payload(9, 0, 0, &[]);
        payload[0] ^= 0xff;
        assert!(matches!(decode_index(&wrap_envelope(&payload), false), Err(FormatError::BadIndexMagic(_))));
    }

    #[test]
    fn test_empty_and_short_buffers() {
        assert!(matches!(decode_index(&[], false), Err(FormatError::Truncated { .. })));
        let payload = index_payload(9, 0, 0, &[]);
        let short = wrap_envelope(&payload[..20]);
        assert!(matches!(decode_index(&short, false), Err(FormatError::Truncated { what: "index metadata", .. })));
    }

    #[test]
    fn test_empty_index() {
        let index = decode_index(&index_file(9, &[]), true).unwrap();
        assert!(index.entry_hashes.is_empty());
        assert_eq!(index.entry_count, 0);
    }
}
