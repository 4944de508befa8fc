mod test_stats_loop;
