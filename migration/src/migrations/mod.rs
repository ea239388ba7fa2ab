pub mod m202610170001_create_cache_entries;
