pub(crate) mod time;
