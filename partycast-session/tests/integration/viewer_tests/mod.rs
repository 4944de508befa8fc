mod test_viewer_events;
