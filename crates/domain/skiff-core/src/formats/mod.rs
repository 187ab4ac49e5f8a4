pub mod checksum_doc;
