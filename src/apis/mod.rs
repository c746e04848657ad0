pub mod setlist_fm;
