mod gmm;
