mod manager_props;
